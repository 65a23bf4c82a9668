use crate::error::ErrorKind;
use crate::types::Nonce;
use crate::Result;

/// Issues the nonces of the default account for a single provisioning run.
///
/// The sequencer is seeded once from the chain's next nonce and then hands out
/// strictly increasing values. Issuing takes `&mut self`: sharing a sequencer
/// between tasks needs a lock around it, and two runs must never share one.
#[derive(Debug, Default)]
pub struct NonceSequencer {
    seeded_with: Option<Nonce>,
    next: Option<Nonce>,
}

impl NonceSequencer {
    /// An unseeded sequencer. [`NonceSequencer::seed`] must be called before
    /// the first [`NonceSequencer::next`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the first nonce to be issued. Only allowed once.
    pub fn seed(&mut self, initial: Nonce) -> Result<()> {
        if let Some(seed) = self.seeded_with {
            return Err(ErrorKind::Nonce.message(format!(
                "sequencer already seeded with {seed}, refusing to reseed with {initial}"
            )));
        }
        self.seeded_with = Some(initial);
        self.next = Some(initial);
        Ok(())
    }

    /// Return the current nonce and advance the counter by one.
    pub fn next(&mut self) -> Result<Nonce> {
        let current = self
            .next
            .ok_or_else(|| ErrorKind::Nonce.message("sequencer used before being seeded"))?;
        let following = current
            .checked_add(1)
            .ok_or_else(|| ErrorKind::Nonce.message("nonce overflow"))?;
        self.next = Some(following);
        Ok(current)
    }

    /// The nonce the next call to [`NonceSequencer::next`] will return.
    pub fn peek(&self) -> Option<Nonce> {
        self.next
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded_with.is_some()
    }

    /// Number of nonces handed out since seeding.
    pub fn issued(&self) -> u64 {
        match (self.seeded_with, self.next) {
            (Some(seed), Some(next)) => next - seed,
            _ => 0,
        }
    }
}
