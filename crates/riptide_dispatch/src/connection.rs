//! One open database connection and its transaction table.

use crate::error::{DispatchError, DispatchResult};
use crate::rpc;
use parking_lot::Mutex;
use riptide_db::{Database, Transaction};
use riptide_kv::ScanOptions;
use riptide_sync::{
    BeginSyncRequest as SyncOpts, HttpClient, MutatorRegistry, Syncer,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An open database plus the transactions the host currently holds.
pub(crate) struct Connection<C: HttpClient> {
    db: Database,
    syncer: Syncer<C>,
    transactions: Mutex<HashMap<u64, Transaction>>,
    next_transaction_id: AtomicU64,
}

impl<C: HttpClient> Connection<C> {
    pub(crate) fn new(db: Database, client: Arc<C>, mutators: Arc<dyn MutatorRegistry>) -> Self {
        let syncer = Syncer::new(db.clone(), client, mutators);
        Self {
            db,
            syncer,
            transactions: Mutex::new(HashMap::new()),
            next_transaction_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn client_id(&self) -> String {
        self.db.client_id().to_string()
    }

    fn with_transaction<T>(
        &self,
        transaction_id: u64,
        f: impl FnOnce(&mut Transaction) -> DispatchResult<T>,
    ) -> DispatchResult<T> {
        let mut transactions = self.transactions.lock();
        let tx = transactions
            .get_mut(&transaction_id)
            .ok_or(DispatchError::UnknownTransaction(transaction_id))?;
        f(tx)
    }

    pub(crate) fn open_transaction(
        &self,
        req: rpc::OpenTransactionRequest,
    ) -> DispatchResult<rpc::OpenTransactionResponse> {
        let tx = self.db.open_transaction(&req.name, req.args)?;
        let transaction_id = self.next_transaction_id.fetch_add(1, Ordering::SeqCst);
        self.transactions.lock().insert(transaction_id, tx);
        Ok(rpc::OpenTransactionResponse { transaction_id })
    }

    pub(crate) fn has(&self, req: rpc::HasRequest) -> DispatchResult<rpc::HasResponse> {
        self.with_transaction(req.transaction_id, |tx| {
            Ok(rpc::HasResponse {
                has: tx.has(&req.key)?,
            })
        })
    }

    pub(crate) fn get(&self, req: rpc::GetRequest) -> DispatchResult<rpc::GetResponse> {
        self.with_transaction(req.transaction_id, |tx| {
            let value = tx.get(&req.key)?.cloned();
            Ok(rpc::GetResponse {
                has: value.is_some(),
                value,
            })
        })
    }

    pub(crate) fn scan(&self, req: rpc::ScanRequest) -> DispatchResult<rpc::ScanResponse> {
        self.with_transaction(req.transaction_id, |tx| {
            let options = ScanOptions {
                prefix: req.prefix.clone(),
                start_key: req.start_key.clone(),
                limit: req.limit,
            };
            let items = tx
                .scan(&options)?
                .into_iter()
                .map(|(key, value)| rpc::ScanItem { key, value })
                .collect();
            Ok(rpc::ScanResponse { items })
        })
    }

    pub(crate) fn put(&self, req: rpc::PutRequest) -> DispatchResult<rpc::PutResponse> {
        self.with_transaction(req.transaction_id, |tx| {
            tx.put(req.key.clone(), req.value.clone())?;
            Ok(rpc::PutResponse {})
        })
    }

    pub(crate) fn del(&self, req: rpc::DelRequest) -> DispatchResult<rpc::DelResponse> {
        self.with_transaction(req.transaction_id, |tx| {
            Ok(rpc::DelResponse {
                ok: tx.del(&req.key)?,
            })
        })
    }

    pub(crate) fn close_transaction(
        &self,
        req: rpc::CloseTransactionRequest,
    ) -> DispatchResult<rpc::CloseTransactionResponse> {
        let mut transactions = self.transactions.lock();
        let mut tx = transactions
            .remove(&req.transaction_id)
            .ok_or(DispatchError::UnknownTransaction(req.transaction_id))?;
        tx.close();
        Ok(rpc::CloseTransactionResponse {})
    }

    pub(crate) fn commit_transaction(
        &self,
        req: rpc::CommitTransactionRequest,
    ) -> DispatchResult<rpc::CommitTransactionResponse> {
        // The handle is removed regardless of outcome: a failed commit
        // (say, a lost head race) leaves no half-open transaction
        // behind, the host reopens and retries.
        let mut tx = self
            .transactions
            .lock()
            .remove(&req.transaction_id)
            .ok_or(DispatchError::UnknownTransaction(req.transaction_id))?;
        let commit_ref = self.db.commit(&mut tx)?;
        Ok(rpc::CommitTransactionResponse { commit_ref })
    }

    pub(crate) fn get_root(&self) -> DispatchResult<rpc::GetRootResponse> {
        Ok(rpc::GetRootResponse {
            root: self.db.head()?,
        })
    }

    pub(crate) fn begin_sync(
        &self,
        req: rpc::BeginSyncRequest,
    ) -> DispatchResult<rpc::BeginSyncResponse> {
        let result = self.syncer.begin_sync(&SyncOpts {
            batch_push_url: req.batch_push_url,
            diff_server_url: req.diff_server_url,
            data_layer_auth: req.data_layer_auth,
            diff_server_auth: req.diff_server_auth,
        })?;
        Ok(rpc::BeginSyncResponse {
            sync_head: result.sync_head,
            sync_info: result.sync_info,
        })
    }

    pub(crate) fn maybe_end_sync(
        &self,
        req: rpc::MaybeEndSyncRequest,
    ) -> DispatchResult<rpc::MaybeEndSyncResponse> {
        let root = self.syncer.maybe_end_sync(&req.sync_head)?;
        Ok(rpc::MaybeEndSyncResponse { root })
    }
}
