//! Liveness and readiness probes.
//!
//! The process moves through three phases: starting (stores opening,
//! schedulers not yet spawned), ready, and draining once shutdown begins.
//! Readiness holds only in the ready phase; liveness fails only while
//! draining.

use std::sync::atomic::{AtomicU8, Ordering};

use actix_web::{HttpResponse, get, http::header, web};
use serde::Serialize;
use utoipa::ToSchema;

/// Lifecycle phase reported by the probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Starting,
    Ready,
    Draining,
}

impl Phase {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Ready,
            _ => Self::Draining,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::Ready => 1,
            Self::Draining => 2,
        }
    }
}

/// Probe response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProbeResponse {
    pub status: Phase,
}

/// Shared lifecycle phase.
#[derive(Debug, Default)]
pub struct HealthState {
    phase: AtomicU8,
}

impl HealthState {
    /// A state in the starting phase.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Enter the ready phase unless draining has already begun.
    pub fn mark_ready(&self) {
        let _ = self.phase.compare_exchange(
            Phase::Starting.as_u8(),
            Phase::Ready.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Enter the draining phase; irreversible.
    pub fn mark_draining(&self) {
        self.phase.store(Phase::Draining.as_u8(), Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Ready
    }

    pub fn is_alive(&self) -> bool {
        self.phase() != Phase::Draining
    }
}

fn probe(ok: bool, phase: Phase) -> HttpResponse {
    let mut response = if ok {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    response
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(ProbeResponse { status: phase })
}

/// Readiness probe.
#[utoipa::path(
    get,
    path = "/health/ready",
    tags = ["health"],
    responses(
        (status = 200, description = "Serving traffic", body = ProbeResponse),
        (status = 503, description = "Starting or draining", body = ProbeResponse)
    )
)]
#[get("/health/ready")]
pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    probe(state.is_ready(), state.phase())
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health/live",
    tags = ["health"],
    responses(
        (status = 200, description = "Process is alive", body = ProbeResponse),
        (status = 503, description = "Shutting down", body = ProbeResponse)
    )
)]
#[get("/health/live")]
pub async fn live(state: web::Data<HealthState>) -> HttpResponse {
    probe(state.is_alive(), state.phase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test as actix_test};
    use rstest::rstest;
    use serde_json::{Value, json};

    #[rstest]
    fn draining_is_final() {
        let state = HealthState::new();
        state.mark_draining();
        state.mark_ready();

        assert_eq!(state.phase(), Phase::Draining);
        assert!(!state.is_alive());
    }

    #[rstest]
    #[case(false, StatusCode::SERVICE_UNAVAILABLE, "starting")]
    #[case(true, StatusCode::OK, "ready")]
    #[actix_web::test]
    async fn readiness_follows_phase(
        #[case] ready_flag: bool,
        #[case] expected: StatusCode,
        #[case] status: &str,
    ) {
        let state = web::Data::new(HealthState::new());
        if ready_flag {
            state.mark_ready();
        }
        let app = actix_test::init_service(App::new().app_data(state).service(ready)).await;

        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/health/ready").to_request(),
        )
        .await;

        assert_eq!(res.status(), expected);
        assert_eq!(
            res.headers()
                .get(header::CACHE_CONTROL)
                .and_then(|value| value.to_str().ok()),
            Some("no-store")
        );
        let body: Value = actix_test::read_body_json(res).await;
        assert_eq!(body, json!({"status": status}));
    }

    #[rstest]
    #[actix_web::test]
    async fn liveness_fails_once_draining() {
        let state = web::Data::new(HealthState::new());
        let app = actix_test::init_service(App::new().app_data(state.clone()).service(live)).await;

        let live_request = || actix_test::TestRequest::get().uri("/health/live").to_request();

        let before = actix_test::call_service(&app, live_request()).await;
        state.mark_draining();
        let after = actix_test::call_service(&app, live_request()).await;

        assert_eq!(before.status(), StatusCode::OK);
        assert_eq!(after.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
