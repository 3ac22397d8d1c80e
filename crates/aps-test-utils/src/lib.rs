//! Testing utilities for the APS workspace
//!
//! Shared fixtures, plan builders and tracing setup.

#![allow(missing_docs)]

use aps_adapters::ParseContext;
use aps_core::{
    CheckResult, CheckStatus, Evidence, GateStatus, Plan, Provenance, ProvenanceSource,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing_subscriber::EnvFilter;

/// Id used by [`minimal_plan`]
pub const MINIMAL_PLAN_ID: &str = "aps-a1b2c3d4";

/// Intent of exactly 40 characters
pub const MINIMAL_INTENT: &str = "Add password reset flow to the login UI.";

/// Spec Kit documents for an authentication feature
pub mod speckit {
    pub const REQUIREMENTS: &str = r#"# Feature: Authentication

**Feature Branch**: `001-auth`
**Status**: Draft

## User Scenarios & Testing

### P1: Email login

As a registered user, I want to log in with my email, so that I can reach my dashboard.

**Acceptance Scenarios**:
1. **Given** valid credentials, **When** the user submits, **Then** the dashboard opens
2. **Given** a wrong password, **When** the user submits, **Then** an error is shown

## Requirements

### Functional Requirements

- **FR-001**: System MUST hash passwords [NEEDS CLARIFICATION: which hashing algorithm?]
- **FR-002**: System MUST lock an account after 5 failed attempts

### Key Entities

- **User**: A person with login credentials
  - Key Attributes: email, password_hash
  - Relationships: Session

## Success Criteria

- 95% of logins complete in under 1 second
"#;

    pub const IMPLEMENTATION: &str = r"# Implementation Plan: Authentication

**Branch**: `001-auth`

## Summary

Add email and password login backed by a session store.

## Technical Context

**Language/Version**: Rust 1.75
**Primary Dependencies**: axum, argon2
**Storage**: PostgreSQL
**Testing**: cargo test

## Constitution Check

- ✅ **Library-First**: auth lives in its own crate
";

    pub const TASKS: &str = r"# Tasks: Authentication

## Phase 1: Setup

- [T001] Create auth module in `src/auth/mod.rs`
- [T002] [P] Add argon2 dependency

## Phase 2: User Story 1 - Email login

- [ ] T003 [US1] Implement login handler in `src/auth/login.rs`
- [x] T004 [P] [US1] Add session store in `src/auth/session.rs`

**Checkpoint**: Users can sign in
";

    /// Requirements, implementation plan and tasks in one text
    #[must_use]
    pub fn bundle() -> String {
        [REQUIREMENTS, IMPLEMENTATION, TASKS].join("\n")
    }
}

/// BMAD documents for a task tracker
pub mod bmad {
    pub const PRD: &str = "# TaskFlow Product Requirements Document (PRD)

## Goals and Background Context

### Goals

- Teams track work in one place
- Leads see who owns what

### Background Context

Small teams juggle tasks across chat threads and spreadsheets.

## Requirements

### Functional

- FR1: Users can create tasks
- FR2: Users can assign tasks to teammates

### Non Functional

- NFR1: Pages load in under 2 seconds

## Epic List

## Epic 1: Foundation

Goal: Set up the project and basic task storage.

### Story 1.1: Create tasks

**As a** team member,
**I want** to create tasks,
**so that** work is recorded
";

    pub const STORY: &str = "# Story 1.2: Assign tasks

**Branch**: feature/assign-tasks

## Status

Approved

## Story

**As a** project lead,
**I want** to assign tasks to teammates,
**so that** ownership is clear

## Acceptance Criteria

1. A task has at most one assignee
2. Assignees are notified

## Tasks / Subtasks

- [ ] Add assignee column (AC: 1)
  - [ ] Write migration in `migrations/002_assignee.sql`
- [x] Send notification email in `src/notify.rs` (AC: 2)

## Dev Notes

Reuse the mailer from story 1.1.
";

    pub const QA_GATE: &str = "# QA Gate: 1.2

```yaml
schema: 1
story: '1.2'
gate: PASS
status_reason: All acceptance criteria covered by tests
reviewer: Quinn
updated: '2025-01-14T09:00:00Z'
```
";

    /// PRD, story and QA gate in one text
    #[must_use]
    pub fn bundle() -> String {
        [PRD, STORY, QA_GATE].join("\n")
    }
}

/// Fixed timestamp, 2025-01-15T10:30:00Z
#[must_use]
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0)
        .single()
        .unwrap_or_default()
}

/// Parse context with fixed clock and id
#[must_use]
pub fn parse_context() -> ParseContext {
    ParseContext::new()
        .with_timestamp(fixed_time())
        .with_plan_id("aps-0f1e2d3c")
        .with_author("test-suite")
}

/// Well-formed provenance at [`fixed_time`]
#[must_use]
pub fn provenance() -> Provenance {
    Provenance::new(fixed_time(), ProvenanceSource::Cli, "1.0.0")
}

/// Valid plan with no proposed changes
///
/// # Panics
/// Panics if the fixture fails to build
#[must_use]
pub fn minimal_plan() -> Plan {
    Plan::builder()
        .id(MINIMAL_PLAN_ID)
        .intent(MINIMAL_INTENT)
        .provenance(provenance())
        .build()
        .unwrap()
}

/// Evidence with one check, `minutes` after [`fixed_time`]
#[must_use]
pub fn evidence_at(minutes: i64, status: GateStatus) -> Evidence {
    let timestamp = fixed_time() + Duration::minutes(minutes);
    let check = match status {
        GateStatus::Passed => CheckStatus::Passed,
        GateStatus::Failed => CheckStatus::Failed,
        GateStatus::Partial => CheckStatus::Warning,
    };
    Evidence::new("1.0.0", timestamp, status)
        .with_check(CheckResult::new("unit-tests", check, timestamp).with_message("cargo test"))
        .with_summary(format!("gate {}", status.as_str()))
}

/// Install a test subscriber honoring `RUST_LOG`; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
