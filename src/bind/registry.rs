//! Method binding registry.
//!
//! Maps each registered [`MethodSignature`] to its method metadata and, once
//! resolved, to its cached [`SqlCommand`].
//!
//! # Concurrency
//!
//! - Lookups take the read lock only; the write lock is held just long enough
//!   to insert a new entry.
//! - Each entry owns a `OnceCell`, so concurrent first callers of
//!   [`MethodRegistry::command`] run the generator once and the rest wait for
//!   its result. A failed generation leaves the cell empty.
//! - No lock is held across the generator's await points.

use crate::bind::method::{Arg, DaoMethod, MethodSignature, SqlCommand};
use crate::error::{DaoError, DaoResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::debug;

struct Entry {
    method: Arc<DaoMethod>,
    command: Arc<OnceCell<Arc<SqlCommand>>>,
}

/// Registry of DAO methods and their resolved commands.
#[derive(Default)]
pub struct MethodRegistry {
    entries: RwLock<HashMap<MethodSignature, Entry>>,
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry").finish_non_exhaustive()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `method`; re-registering an identical method is a no-op.
    pub async fn register(&self, method: DaoMethod) -> DaoResult<MethodSignature> {
        let signature = method.signature();
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&signature) {
                return check_same(&signature, &entry.method, &method);
            }
        }

        let mut entries = self.entries.write().await;
        // Double-check after acquiring write lock
        if let Some(entry) = entries.get(&signature) {
            return check_same(&signature, &entry.method, &method);
        }
        debug!(signature = %signature, "Registering method");
        entries.insert(
            signature.clone(),
            Entry {
                method: Arc::new(method),
                command: Arc::new(OnceCell::new()),
            },
        );
        Ok(signature)
    }

    /// Set the command for `signature` directly.
    ///
    /// A different command already cached under the signature is rejected.
    pub async fn register_command(
        &self,
        signature: &MethodSignature,
        command: SqlCommand,
    ) -> DaoResult<Arc<SqlCommand>> {
        let cell = self.cell(signature).await?;
        let cached = cell
            .get_or_init(|| async { Arc::new(command.clone()) })
            .await;
        if **cached != command {
            return Err(DaoError::configuration(format!(
                "{} already bound to a different command",
                signature
            )));
        }
        Ok(Arc::clone(cached))
    }

    /// Pick the overload of `interface::method` that fits `args` most closely.
    ///
    /// An overload wins when every argument fits it at least as closely as it
    /// fits any other accepting overload. Without a single winner the call is
    /// ambiguous.
    pub async fn resolve(
        &self,
        interface: &str,
        method: &str,
        args: &[Arg],
    ) -> DaoResult<MethodSignature> {
        let entries = self.entries.read().await;
        let mut candidates = Vec::new();
        let mut known = false;
        for (signature, entry) in entries.iter() {
            if signature.interface() != interface || signature.name() != method {
                continue;
            }
            known = true;
            if let Some(ranks) = entry.method.match_ranks(args) {
                candidates.push((signature, ranks));
            }
        }

        let winners: Vec<&MethodSignature> = candidates
            .iter()
            .filter(|(_, ranks)| {
                candidates.iter().all(|(_, other)| {
                    ranks.iter().zip(other).all(|(rank, other)| rank <= other)
                })
            })
            .map(|(signature, _)| *signature)
            .collect();

        match (winners.as_slice(), candidates.len()) {
            ([signature], _) => Ok((*signature).clone()),
            (_, 0) if !known => Err(DaoError::configuration(format!(
                "No method {}::{} is registered",
                interface, method
            ))),
            (_, 0) => Err(DaoError::configuration(format!(
                "No overload of {}::{} accepts {} arguments of the given types",
                interface,
                method,
                args.len()
            ))),
            (_, matching) => Err(DaoError::configuration(format!(
                "Ambiguous call to {}::{}: {} overloads match",
                interface, method, matching
            ))),
        }
    }

    pub async fn lookup(&self, signature: &MethodSignature) -> DaoResult<Arc<DaoMethod>> {
        let entries = self.entries.read().await;
        entries
            .get(signature)
            .map(|entry| Arc::clone(&entry.method))
            .ok_or_else(|| not_registered(signature))
    }

    /// Cached command for `signature`, generating it on first use.
    pub async fn command<F, Fut>(
        &self,
        signature: &MethodSignature,
        generator: F,
    ) -> DaoResult<Arc<SqlCommand>>
    where
        F: FnOnce(Arc<DaoMethod>) -> Fut,
        Fut: Future<Output = DaoResult<SqlCommand>>,
    {
        let (method, cell) = {
            let entries = self.entries.read().await;
            let entry = entries
                .get(signature)
                .ok_or_else(|| not_registered(signature))?;
            (Arc::clone(&entry.method), Arc::clone(&entry.command))
        };

        let command = cell
            .get_or_try_init(|| async move {
                debug!(signature = %signature, "Resolving command");
                generator(method).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(command))
    }

    /// Cached command, if one was resolved already.
    pub async fn cached(&self, signature: &MethodSignature) -> Option<Arc<SqlCommand>> {
        let entries = self.entries.read().await;
        entries
            .get(signature)
            .and_then(|entry| entry.command.get().cloned())
    }

    /// Number of registered methods.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn cell(&self, signature: &MethodSignature) -> DaoResult<Arc<OnceCell<Arc<SqlCommand>>>> {
        let entries = self.entries.read().await;
        entries
            .get(signature)
            .map(|entry| Arc::clone(&entry.command))
            .ok_or_else(|| not_registered(signature))
    }
}

fn check_same(
    signature: &MethodSignature,
    existing: &DaoMethod,
    method: &DaoMethod,
) -> DaoResult<MethodSignature> {
    if existing == method {
        Ok(signature.clone())
    } else {
        Err(DaoError::configuration(format!(
            "{} is already registered with a different definition",
            signature
        )))
    }
}

fn not_registered(signature: &MethodSignature) -> DaoError {
    DaoError::configuration(format!("{} is not registered", signature))
}
