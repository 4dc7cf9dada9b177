//! `define_port_error!`: error enums for driven ports.
//!
//! Every variant carries named fields and a display template. The macro
//! derives `thiserror::Error` and adds one snake_case constructor per
//! variant whose parameters accept `impl Into<FieldType>`, so adapters can
//! write `DumpStoreError::io(err.to_string())` or
//! `MirrorStoreError::write(table.name(), "disk full")`.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident { $($field:ident : $ty:ty),+ $(,)? } => $message:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant { $($field: $ty),+ },
            )+
        }

        ::paste::paste! {
            impl $name {
                $(
                    #[doc = "Build the `" $variant "` variant."]
                    pub fn [<$variant:snake>]($($field: impl Into<$ty>),+) -> Self {
                        Self::$variant { $($field: $field.into()),+ }
                    }
                )+
            }
        }
    };
}

pub(crate) use define_port_error;
