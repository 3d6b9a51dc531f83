//! Batch push of pending local mutations.

use crate::transport::{HttpClient, DEFAULT_TIMEOUT};
use riptide_db::PendingMutation;
use riptide_protocol::{BatchPushInfo, BatchPushRequest, Mutation};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Delivers pending mutations to the batch endpoint.
///
/// Push is purely informational on the client side: the server's state
/// is the source of truth for what took, and the next pull's
/// `lastMutationID` is what retires pending mutations. Accordingly push
/// never fails fatally - every outcome, including transport failure,
/// comes back as a [`BatchPushInfo`] for the caller to log.
pub struct Pusher<C: HttpClient> {
    client: Arc<C>,
    timeout: Duration,
}

impl<C: HttpClient> Pusher<C> {
    /// Creates a pusher with the default timeout.
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the request deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends `pending` (oldest first) as one batch.
    pub fn push(
        &self,
        pending: &[PendingMutation],
        url: &str,
        data_layer_auth: &str,
        client_id: &str,
    ) -> BatchPushInfo {
        let mut info = BatchPushInfo::default();
        let with_err = |mut info: BatchPushInfo, msg: String| {
            info.error_message = format!("during request to {url}: {msg}");
            info
        };

        let request = BatchPushRequest {
            client_id: client_id.to_string(),
            mutations: pending
                .iter()
                .map(|p| Mutation {
                    id: p.mutation_id,
                    name: p.name.clone(),
                    args: p.args.clone(),
                })
                .collect(),
        };
        let body = match serde_json::to_vec(&request) {
            Ok(body) => body,
            Err(e) => return with_err(info, e.to_string()),
        };
        debug!(url, mutations = pending.len(), "pushing");

        let response = match self.client.post(url, data_layer_auth, body, self.timeout) {
            Ok(response) => response,
            Err(e) => {
                let msg = match e {
                    crate::transport::HttpError::Timeout => "request timed out".to_string(),
                    crate::transport::HttpError::Network(m) => m,
                };
                return with_err(info, msg);
            }
        };

        info.http_status_code = response.status;
        if response.status == 200 {
            match serde_json::from_slice(&response.body) {
                Ok(resp) => info.batch_push_response = resp,
                Err(e) => {
                    return with_err(info, format!("error decoding batch push response: {e}"))
                }
            }
        } else {
            info.error_message = String::from_utf8_lossy(&response.body).into_owned();
        }
        info
    }
}
