//! Tests for dump script rendering.

use super::*;
use chrono::{TimeZone, Timelike};
use rstest::{fixture, rstest};

fn timestamp(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT).expect("valid timestamp fixture")
}

#[fixture]
fn brand_table() -> TableDump {
    TableDump {
        name: "brand".to_owned(),
        create_statement: "CREATE TABLE `brand` (\n  `id` int NOT NULL,\n  `name` varchar(191) NOT NULL,\n  `description` text,\n  `active` tinyint(1) NOT NULL,\n  `created_at` datetime(3) NOT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB".to_owned(),
        columns: vec![
            "id".to_owned(),
            "name".to_owned(),
            "description".to_owned(),
            "active".to_owned(),
            "created_at".to_owned(),
        ],
        rows: vec![
            vec![
                SqlValue::Int(1),
                SqlValue::Text("Anchor".to_owned()),
                SqlValue::Null,
                SqlValue::Bool(true),
                SqlValue::DateTime(timestamp("2024-01-05 09:30:00")),
            ],
            vec![
                SqlValue::Int(2),
                SqlValue::Text("Kid's \"Choice\" \\ Co".to_owned()),
                SqlValue::Text("line one\nline two".to_owned()),
                SqlValue::Bool(false),
                SqlValue::DateTime(timestamp("2024-02-29 23:59:59")),
            ],
        ],
    }
}

/// Unescape one MySQL string literal body, the inverse of `quote_string`.
fn unescape(body: &str) -> String {
    let mut out = String::new();
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('\0'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('Z') => out.push('\u{1a}'),
            Some(other) => out.push(other),
            None => panic!("dangling escape in literal"),
        }
    }
    out
}

/// Split the `VALUES (...)` tuple of an INSERT line into literal values.
///
/// `None` stands for `NULL`; quoted literals are unescaped.
fn parse_values(line: &str) -> Vec<Option<String>> {
    let start = line.find("VALUES (").expect("insert has VALUES") + "VALUES (".len();
    let tuple = line
        .get(start..)
        .and_then(|rest| rest.strip_suffix(");"))
        .expect("insert ends with );");

    let mut values = Vec::new();
    let mut chars = tuple.chars().peekable();
    loop {
        while chars.peek() == Some(&' ') {
            chars.next();
        }
        let Some(first) = chars.peek().copied() else {
            break;
        };
        if first == '\'' {
            chars.next();
            let mut body = String::new();
            while let Some(ch) = chars.next() {
                match ch {
                    '\\' => {
                        body.push(ch);
                        body.push(chars.next().expect("escaped character"));
                    }
                    '\'' => break,
                    other => body.push(other),
                }
            }
            values.push(Some(unescape(&body)));
        } else {
            let mut raw = String::new();
            while let Some(ch) = chars.peek().copied() {
                if ch == ',' {
                    break;
                }
                raw.push(ch);
                chars.next();
            }
            let raw = raw.trim().to_owned();
            values.push(if raw == "NULL" { None } else { Some(raw) });
        }
        if chars.peek() == Some(&',') {
            chars.next();
        }
    }
    values
}

fn expected_text(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => None,
        SqlValue::Bool(flag) => Some(String::from(if *flag { "1" } else { "0" })),
        SqlValue::Int(number) => Some(number.to_string()),
        SqlValue::Text(text) => Some(text.clone()),
        SqlValue::DateTime(ts) => Some(ts.format(DATETIME_FORMAT).to_string()),
        other => panic!("unexpected fixture value {other:?}"),
    }
}

#[rstest]
fn render_table_round_trips_rows(brand_table: TableDump) {
    let rendered = render_table(&brand_table);
    let inserts: Vec<&str> = rendered
        .lines()
        .filter(|line| line.starts_with("INSERT INTO"))
        .collect();

    assert_eq!(inserts.len(), brand_table.rows.len());
    for (line, row) in inserts.iter().zip(&brand_table.rows) {
        let parsed = parse_values(line);
        let expected: Vec<Option<String>> = row.iter().map(expected_text).collect();
        assert_eq!(parsed, expected, "row mismatch for {line}");
    }
}

#[rstest]
fn render_table_emits_drop_before_create(brand_table: TableDump) {
    let rendered = render_table(&brand_table);
    let drop_at = rendered
        .find("DROP TABLE IF EXISTS `brand`;")
        .expect("drop statement");
    let create_at = rendered.find("CREATE TABLE `brand`").expect("create statement");
    let insert_at = rendered.find("INSERT INTO `brand`").expect("insert statement");

    assert!(drop_at < create_at && create_at < insert_at);
    assert!(rendered.contains("ENGINE=InnoDB;"));
}

#[rstest]
fn render_table_skips_data_section_for_empty_tables(mut brand_table: TableDump) {
    brand_table.rows.clear();
    let rendered = render_table(&brand_table);

    assert!(!rendered.contains("INSERT INTO"));
    assert!(!rendered.contains("-- Data for"));
}

#[rstest]
fn render_script_wraps_body_in_foreign_key_toggles(brand_table: TableDump) {
    let created_at = Utc
        .with_ymd_and_hms(2024, 3, 1, 2, 0, 0)
        .single()
        .expect("valid time");
    let script = render_script("pos", created_at, &[brand_table]);

    assert!(script.starts_with("-- POS database backup\n"));
    assert!(script.contains("-- Database: pos"));
    assert!(script.contains("-- Created: 2024-03-01T02:00:00+00:00"));
    let disable = script.find("SET FOREIGN_KEY_CHECKS=0;").expect("disable");
    let create = script.find("CREATE TABLE").expect("create");
    assert!(disable < create);
    assert!(script.trim_end().ends_with("SET FOREIGN_KEY_CHECKS=1;"));
}

#[rstest]
#[case(SqlValue::Null, "NULL")]
#[case(SqlValue::Bool(false), "0")]
#[case(SqlValue::UInt(18_446_744_073_709_551_615), "18446744073709551615")]
#[case(SqlValue::Float(12.5), "12.5")]
#[case(SqlValue::Float(f64::NAN), "NULL")]
#[case(SqlValue::Decimal("1250.00".to_owned()), "1250.00")]
#[case(SqlValue::Bytes(vec![0xde, 0xad, 0x01]), "X'DEAD01'")]
#[case(SqlValue::Bytes(Vec::new()), "''")]
#[case(SqlValue::Text("a\\b'c\0\r\u{1a}".to_owned()), "'a\\\\b\\'c\\0\\r\\Z'")]
fn literals_are_escaped(#[case] value: SqlValue, #[case] expected: &str) {
    assert_eq!(value.to_literal(), expected);
}

#[rstest]
fn date_and_time_literals_use_mysql_layout() {
    let date = NaiveDate::from_ymd_opt(2024, 7, 4).expect("valid date");
    let time = NaiveTime::from_hms_opt(8, 5, 9).expect("valid time");
    let with_fraction = timestamp("2024-07-04 08:05:09")
        .with_nanosecond(123_000_000)
        .expect("valid nanos");

    assert_eq!(SqlValue::Date(date).to_literal(), "'2024-07-04'");
    assert_eq!(SqlValue::Time(time).to_literal(), "'08:05:09'");
    assert_eq!(
        SqlValue::DateTime(with_fraction).to_literal(),
        "'2024-07-04 08:05:09'"
    );
}

#[rstest]
fn identifiers_double_embedded_backticks() {
    assert_eq!(quote_identifier("odd`name"), "`odd``name`");
}
