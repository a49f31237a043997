//! Deal lifecycle states and the status history of a single deal
use super::deal::TimeStamp;
use super::error::DealError;
use super::utils;
use chrono::Utc;
use std::fmt;

/// Progress reported for a status string we do not recognise.
pub const UNKNOWN_PROGRESS: u8 = 0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, minicbor::Encode, minicbor::Decode,
)]
pub enum DealStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    Pending,
    #[n(2)]
    CounterpartyReview,
    #[n(3)]
    InProgress,
    #[n(4)]
    InjectionScheduled,
    #[n(5)]
    InjectionInProgress,
    #[n(6)]
    Verification,
    #[n(7)]
    Completed,
    #[n(8)]
    Cancelled,
    #[n(9)]
    Disputed,
}

impl DealStatus {
    /// The happy path, in order.
    pub const HAPPY_PATH: [DealStatus; 8] = [
        DealStatus::Draft,
        DealStatus::Pending,
        DealStatus::CounterpartyReview,
        DealStatus::InProgress,
        DealStatus::InjectionScheduled,
        DealStatus::InjectionInProgress,
        DealStatus::Verification,
        DealStatus::Completed,
    ];

    pub fn progress(&self) -> u8 {
        match self {
            DealStatus::Draft => 5,
            DealStatus::Pending => 15,
            DealStatus::CounterpartyReview => 25,
            DealStatus::InProgress => 40,
            DealStatus::InjectionScheduled => 55,
            DealStatus::InjectionInProgress => 70,
            DealStatus::Verification => 85,
            DealStatus::Completed => 100,
            DealStatus::Cancelled | DealStatus::Disputed => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Draft => "draft",
            DealStatus::Pending => "pending",
            DealStatus::CounterpartyReview => "counterparty_review",
            DealStatus::InProgress => "in_progress",
            DealStatus::InjectionScheduled => "injection_scheduled",
            DealStatus::InjectionInProgress => "injection_in_progress",
            DealStatus::Verification => "verification",
            DealStatus::Completed => "completed",
            DealStatus::Cancelled => "cancelled",
            DealStatus::Disputed => "disputed",
        }
    }

    /// Parse a stored status value. Returns `None` for anything outside the closed set.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let normalised = raw.trim().to_ascii_lowercase();
        match normalised.as_str() {
            "draft" => Some(DealStatus::Draft),
            "pending" => Some(DealStatus::Pending),
            "counterparty_review" => Some(DealStatus::CounterpartyReview),
            "in_progress" => Some(DealStatus::InProgress),
            "injection_scheduled" => Some(DealStatus::InjectionScheduled),
            "injection_in_progress" => Some(DealStatus::InjectionInProgress),
            "verification" => Some(DealStatus::Verification),
            "completed" => Some(DealStatus::Completed),
            "cancelled" => Some(DealStatus::Cancelled),
            "disputed" => Some(DealStatus::Disputed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DealStatus::Completed | DealStatus::Cancelled | DealStatus::Disputed
        )
    }

    /// Position on the happy path, `None` for the side exits.
    pub fn path_index(&self) -> Option<usize> {
        Self::HAPPY_PATH.iter().position(|status| status == self)
    }

    /// Forward moves only. Cancellation is open to every live deal, a dispute
    /// only once the counterparty has seen the deal.
    pub fn can_transition_to(&self, next: DealStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            DealStatus::Cancelled => true,
            DealStatus::Disputed => *self >= DealStatus::CounterpartyReview,
            _ => match (self.path_index(), next.path_index()) {
                (Some(current), Some(target)) => target > current,
                _ => false,
            },
        }
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Progress for a raw status value, falling back to [`UNKNOWN_PROGRESS`].
pub fn progress_for(raw: &str) -> u8 {
    DealStatus::from_raw(raw)
        .map(|status| status.progress())
        .unwrap_or(UNKNOWN_PROGRESS)
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct StatusChange {
    #[n(0)]
    pub from: DealStatus,
    #[n(1)]
    pub to: DealStatus,
    #[n(2)]
    pub changed_by: String,
    #[n(3)]
    pub changed_at: TimeStamp<Utc>,
    #[n(4)]
    pub note: Option<String>,
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct DealContext {
    #[n(0)]
    pub deal_id: String, // bech32 encoded uuid7
    #[n(1)]
    pub details_hash: String, // key of the encoded deal details
    #[n(2)]
    pub owner: String,
    #[n(3)]
    pub history: Vec<StatusChange>,
}

impl DealContext {
    pub fn new(details_hash: String, owner: String) -> anyhow::Result<Self> {
        let deal_id = utils::new_uuid_to_bech32("deal_")?;
        Ok(Self::new_with(deal_id, details_hash, owner))
    }

    pub fn new_with(deal_id: String, details_hash: String, owner: String) -> Self {
        Self {
            deal_id,
            details_hash,
            owner,
            history: vec![],
        }
    }

    /// Derived from the latest change, a deal without history is a draft.
    pub fn current_status(&self) -> DealStatus {
        self.history
            .last()
            .map(|change| change.to)
            .unwrap_or(DealStatus::Draft)
    }

    pub fn progress(&self) -> u8 {
        self.current_status().progress()
    }

    pub fn is_terminal(&self) -> bool {
        self.current_status().is_terminal()
    }

    /// Append a status change after checking it against the transition table.
    pub fn advance(
        &mut self,
        to: DealStatus,
        changed_by: String,
        note: Option<String>,
    ) -> Result<&StatusChange, DealError> {
        let from = self.current_status();
        if !from.can_transition_to(to) {
            return Err(DealError::InvalidTransition { from, to });
        }

        self.history.push(StatusChange {
            from,
            to,
            changed_by,
            changed_at: TimeStamp::new(),
            note,
        });

        // just pushed
        Ok(&self.history[self.history.len() - 1])
    }
}
