//! In-memory connection pool for exercising the session and tool handlers
//! without a database.

#![allow(dead_code)]

use sql_gate_mcp::db::{ConnectionPool, PooledConnection};
use sql_gate_mcp::error::{DriverError, DriverErrorKind};
use sql_gate_mcp::models::{QueryParam, StatementOutput};
use sql_gate_mcp::tools::StatementKind;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared counters and failure switches.
#[derive(Default)]
pub struct MockState {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub fail_acquire: AtomicBool,
    pub fail_begin: AtomicBool,
    pub fail_commit: AtomicBool,
    pub fail_rollback: AtomicBool,
    pub fail_execute: AtomicBool,
    pub execute_delay_ms: AtomicU64,
    /// (connection id, sql) in execution order
    pub executed: Mutex<Vec<(usize, String)>>,
}

impl MockState {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<(usize, String)> {
        self.executed.lock().unwrap().clone()
    }

    fn failure(message: &str) -> DriverError {
        DriverError::new(DriverErrorKind::Statement, message)
    }
}

#[derive(Clone, Default)]
pub struct MockPool {
    pub state: Arc<MockState>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.state.fail_acquire.store(fail, Ordering::SeqCst);
    }

    pub fn fail_begin(&self, fail: bool) {
        self.state.fail_begin.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commit(&self, fail: bool) {
        self.state.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rollback(&self, fail: bool) {
        self.state.fail_rollback.store(fail, Ordering::SeqCst);
    }

    pub fn fail_execute(&self, fail: bool) {
        self.state.fail_execute.store(fail, Ordering::SeqCst);
    }

    pub fn delay_execute(&self, delay: Duration) {
        self.state
            .execute_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

pub struct MockConnection {
    id: usize,
    state: Arc<MockState>,
}

impl MockConnection {
    /// Identity of the underlying connection, unique per acquisition.
    pub fn id(&self) -> usize {
        self.id
    }
}

impl PooledConnection for MockConnection {
    async fn execute(
        &mut self,
        sql: &str,
        kind: StatementKind,
        _params: &[QueryParam],
    ) -> Result<StatementOutput, DriverError> {
        let delay = self.state.execute_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.state.fail_execute.load(Ordering::SeqCst) {
            return Err(MockState::failure("syntax error").with_statement(sql));
        }
        self.state
            .executed
            .lock()
            .unwrap()
            .push((self.id, sql.to_string()));

        if kind.returns_rows() {
            let mut row = serde_json::Map::new();
            row.insert("connection".to_string(), serde_json::json!(self.id));
            Ok(StatementOutput::rows(vec![row]))
        } else {
            Ok(StatementOutput::write(1))
        }
    }

    async fn begin_transaction(&mut self) -> Result<(), DriverError> {
        self.state.begins.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_begin.load(Ordering::SeqCst) {
            return Err(MockState::failure("cannot start transaction"));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.state.commits.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_commit.load(Ordering::SeqCst) {
            return Err(MockState::failure("deadlock detected"));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_rollback.load(Ordering::SeqCst) {
            return Err(DriverError::new(DriverErrorKind::Connection, "connection reset"));
        }
        Ok(())
    }

    fn release(self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl ConnectionPool for MockPool {
    type Connection = MockConnection;

    async fn acquire(&self) -> Result<MockConnection, DriverError> {
        if self.state.fail_acquire.load(Ordering::SeqCst) {
            return Err(DriverError::new(DriverErrorKind::Timeout, "pool timed out"));
        }
        let id = self.state.acquired.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockConnection {
            id,
            state: self.state.clone(),
        })
    }
}
