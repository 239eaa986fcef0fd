//! Async side of a cart: lot scans and the commit round trip.

use std::{future::Future, time::Duration};

use crate::{
    cart::StagingCart,
    errors::{Error, RejectReason},
    inputs::LotRecord,
    ports::{CommitGateway, LotLookup},
    workflows::Workflow,
};

/// One operator session over one cart.
pub struct CartSession<W: Workflow> {
    cart: StagingCart<W>,
    timeout: Option<Duration>,
}

impl<W: Workflow> CartSession<W> {
    pub fn new(cart: StagingCart<W>) -> Self {
        Self {
            cart,
            timeout: None,
        }
    }

    /// Bound every backend call made through this session.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cart(&self) -> &StagingCart<W> {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut StagingCart<W> {
        &mut self.cart
    }

    /// Send the staged batch in one request.
    ///
    /// The cart is cleared on success. On any failure it goes back to staging
    /// untouched, and a retry reuses the same idempotency key and body.
    pub async fn commit<G>(&mut self, gateway: &G, header: &W::Header) -> Result<W::Receipt, Error>
    where
        G: CommitGateway<W> + ?Sized,
    {
        self.cart.validate_submission(header)?;
        let idempotency_key = self.cart.begin_commit().await?;
        let payload = match self.cart.to_submission_payload(header) {
            Ok(payload) => payload,
            Err(reason) => {
                self.cart.fail_commit(reason.to_string()).await?;
                return Err(reason.into());
            }
        };

        tracing::info!(
            "Committing {} items from {} cart {} (key {})",
            self.cart.len(),
            W::NAME,
            self.cart.id(),
            idempotency_key
        );

        match bounded(self.timeout, gateway.commit(&payload, &idempotency_key)).await {
            Ok(receipt) => {
                self.cart.complete_commit().await?;
                tracing::info!("Commit {} succeeded: {:?}", idempotency_key, receipt);
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!("Commit {} failed: {}", idempotency_key, e);
                self.cart.fail_commit(e.operator_message()).await?;
                Err(e)
            }
        }
    }

    /// Drop everything staged, e.g. when the operator cancels the form.
    pub async fn abandon(&mut self) -> Result<(), RejectReason> {
        self.cart.clear().await?;
        self.cart.clear_lookup();
        Ok(())
    }
}

impl<W> CartSession<W>
where
    W: Workflow<Lookup = LotRecord>,
{
    /// Resolve a scanned or typed lot code into the active lookup.
    ///
    /// The previous lookup is dropped before the request goes out, so a
    /// failed scan never leaves stale data behind.
    pub async fn scan<L>(&mut self, source: &L, code: &str) -> Result<&LotRecord, Error>
    where
        L: LotLookup + ?Sized,
    {
        self.cart.clear_lookup();

        let code = code.trim();
        if code.is_empty() {
            return Err(RejectReason::MissingField {
                field: "codigo".to_string(),
            }
            .into());
        }

        let record = match bounded(self.timeout, source.lookup_lot(code)).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Lot lookup for {} failed: {}", code, e);
                return Err(e);
            }
        };

        self.cart.set_lookup(record)?;
        self.cart.lookup().ok_or(Error::Rejected(RejectReason::NoActiveLookup))
    }
}

/// Await `call`, resolving to `RequestTimedOut` once `limit` elapses.
pub async fn bounded<T, F>(limit: Option<Duration>, call: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(Error::RequestTimedOut)),
        None => call.await,
    }
}
