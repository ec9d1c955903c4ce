// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-routed passdb: every lookup is dispatched through an
//! `authd_workers::WorkerPool` (spec.md §4.5), exercising the
//! blocking-backend path end to end without a real SQL/LDAP client.

use authd_core::Clock;
use authd_workers::{WorkerOp, WorkerPool, WorkerResult};

use crate::error::PassdbError;

use super::{Passdb, PassdbResult, StoredCredential};

pub struct WorkerPassdb<C: Clock> {
    pool: WorkerPool<C>,
}

impl<C: Clock> WorkerPassdb<C> {
    pub fn new(pool: WorkerPool<C>) -> WorkerPassdb<C> {
        WorkerPassdb { pool }
    }
}

#[async_trait::async_trait]
impl<C: Clock + Send + Sync> Passdb for WorkerPassdb<C> {
    fn kind(&self) -> &'static str {
        "worker"
    }

    fn is_blocking(&self) -> bool {
        true
    }

    async fn verify_plain(&self, user: &str, password: &str) -> Result<PassdbResult, PassdbError> {
        let reply = self
            .pool
            .dispatch(WorkerOp::PassV, vec![user.to_string(), password.to_string()])
            .await?;
        Ok(match reply.result {
            WorkerResult::Ok => PassdbResult::Ok { extra: reply.fields },
            WorkerResult::Fail => PassdbResult::Mismatch,
            WorkerResult::NotFound => PassdbResult::UserUnknown,
            WorkerResult::Tempfail => return Err(PassdbError::Tempfail("worker tempfail".to_string())),
        })
    }

    async fn lookup_credentials(&self, user: &str) -> Result<Option<StoredCredential>, PassdbError> {
        let reply = self.pool.dispatch(WorkerOp::PassL, vec![user.to_string()]).await?;
        match reply.result {
            WorkerResult::Ok => {
                let fields: std::collections::HashMap<_, _> = reply.fields.into_iter().collect();
                let scheme = fields.get("scheme").cloned().unwrap_or_else(|| "PLAIN".to_string());
                let encoded = fields.get("encoded").cloned().unwrap_or_default();
                Ok(Some(StoredCredential { scheme, encoded }))
            }
            WorkerResult::NotFound => Ok(None),
            WorkerResult::Fail => Ok(None),
            WorkerResult::Tempfail => Err(PassdbError::Tempfail("worker tempfail".to_string())),
        }
    }
}
