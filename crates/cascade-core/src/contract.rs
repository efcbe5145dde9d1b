//! Trigger dispatcher.
//!
//! [`Contract`] turns one incoming [`Trigger`] into either a committed
//! [`Response`] plus the [`WriteSet`] to persist, or a [`Bounce`] that leaves
//! state untouched and refunds the sender.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::constants::{DEFAULT_DONATION_STORAGE_FEE, DEFAULT_PROCESSING_FEE, DEFAULT_RULES_STORAGE_FEE};
use crate::distribution;
use crate::error::{CascadeError, DispatchError, FeeError, RepoError};
use crate::intake;
use crate::nickname;
use crate::rules;
use crate::state::{StagedState, StateStore, WriteSet};
use crate::traits::OwnerResolver;
use crate::types::{Address, Amount, Asset, Bounce, Payment, RepoId, Response, Trigger};
use crate::validation::{validate_address, validate_asset, validate_repo_id};

/// Native fees charged by the contract.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct FeeSchedule {
    /// Minimum native attachment on every trigger; kept on bounce.
    pub processing_fee: Amount,
    /// Storage fee for a donation.
    pub donation_storage_fee: Amount,
    /// Storage fee for a rule set.
    pub rules_storage_fee: Amount,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            processing_fee: DEFAULT_PROCESSING_FEE,
            donation_storage_fee: DEFAULT_DONATION_STORAGE_FEE,
            rules_storage_fee: DEFAULT_RULES_STORAGE_FEE,
        }
    }
}

/// A parsed trigger payload.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Request {
    SetRules { repo: RepoId, rules: Option<Value> },
    Donate { repo: RepoId },
    Distribute { repo: RepoId, asset: Asset, to: Option<Address> },
    Nickname(Value),
}

impl Request {
    fn kind(&self) -> &'static str {
        match self {
            Self::SetRules { .. } => "set_rules",
            Self::Donate { .. } => "donate",
            Self::Distribute { .. } => "distribute",
            Self::Nickname(_) => "nickname",
        }
    }
}

fn repo_field(data: &Value) -> Result<RepoId, RepoError> {
    match data.get("repo") {
        Some(Value::String(s)) => validate_repo_id(s),
        Some(other) => Err(RepoError::InvalidFormat(other.to_string())),
        None => Err(RepoError::InvalidFormat(Value::Null.to_string())),
    }
}

fn asset_field(data: &Value) -> Result<Asset, RepoError> {
    match data.get("asset") {
        None | Some(Value::Null) => Ok(Asset::Base),
        Some(Value::String(s)) => validate_asset(s),
        Some(other) => Err(RepoError::InvalidAsset(other.to_string())),
    }
}

fn to_field(data: &Value) -> Result<Option<Address>, RepoError> {
    match data.get("to") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => validate_address(s).map(Some),
        Some(other) => Err(RepoError::InvalidAddress(other.to_string())),
    }
}

/// Route a payload by its first recognised key.
fn parse_request(data: &Value) -> Result<Request, CascadeError> {
    let Some(obj) = data.as_object() else {
        return Err(DispatchError::UnknownRequest.into());
    };
    if obj.contains_key("set_rules") {
        return Ok(Request::SetRules {
            repo: repo_field(data)?,
            rules: obj.get("rules").cloned(),
        });
    }
    if obj.contains_key("donate") {
        return Ok(Request::Donate { repo: repo_field(data)? });
    }
    if obj.contains_key("distribute") {
        return Ok(Request::Distribute {
            repo: repo_field(data)?,
            asset: asset_field(data)?,
            to: to_field(data)?,
        });
    }
    if let Some(value) = obj.get("nickname") {
        return Ok(Request::Nickname(value.clone()));
    }
    Err(DispatchError::UnknownRequest.into())
}

/// The settlement contract.
#[derive(Debug, Clone, Default)]
pub struct Contract {
    fees: FeeSchedule,
}

impl Contract {
    pub fn new(fees: FeeSchedule) -> Self {
        Self { fees }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Run `trigger` against `store` without writing anything.
    ///
    /// On success returns the response and the writes the caller must apply
    /// atomically. On failure returns the bounce; there is nothing to undo.
    pub fn execute<S: StateStore + ?Sized>(
        &self,
        store: &S,
        resolver: &dyn OwnerResolver,
        trigger: &Trigger,
    ) -> Result<(Response, WriteSet), Bounce> {
        if trigger.base_total() < self.fees.processing_fee {
            warn!(address = %trigger.address, base = trigger.base_total(), "refusing trigger without processing fee");
            return Err(self.refuse(trigger));
        }

        let mut state = StagedState::new(store);
        match self.route(&mut state, resolver, trigger) {
            Ok((kind, response)) => {
                info!(address = %trigger.address, request = kind, message = %response.message, "trigger committed");
                Ok((response, state.into_writes()))
            }
            Err(err) => Err(self.bounce(trigger, &err)),
        }
    }

    /// Run `trigger` and apply its writes to `store` on success.
    pub fn handle<S: StateStore + ?Sized>(
        &self,
        store: &mut S,
        resolver: &dyn OwnerResolver,
        trigger: &Trigger,
    ) -> Result<Response, Bounce> {
        let (response, writes) = self.execute(&*store, resolver, trigger)?;
        store
            .apply(writes)
            .map_err(|err| self.bounce(trigger, &err))?;
        Ok(response)
    }

    fn route<S: StateStore + ?Sized>(
        &self,
        state: &mut StagedState<'_, S>,
        resolver: &dyn OwnerResolver,
        trigger: &Trigger,
    ) -> Result<(&'static str, Response), CascadeError> {
        let request = parse_request(&trigger.data)?;
        let kind = request.kind();
        let base = trigger.base_total();
        let response = match request {
            Request::SetRules { repo, rules } => {
                rules::set_rules(state, resolver, &self.fees, &trigger.address, base, &repo, rules.as_ref())?
            }
            Request::Donate { repo } => {
                intake::donate(state, &self.fees, &trigger.address, &repo, base, trigger.custom_payment())?
            }
            Request::Distribute { repo, asset, to } => {
                distribution::distribute(state, resolver, &repo, &asset, to.as_ref())?
            }
            Request::Nickname(value) => nickname::set_nickname(state, &trigger.address, &value)?,
        };
        Ok((kind, response))
    }

    /// Build the bounce for a trigger that failed with `err`.
    ///
    /// The processing fee is kept; everything else attached goes back.
    pub fn bounce(&self, trigger: &Trigger, err: &CascadeError) -> Bounce {
        warn!(address = %trigger.address, error = %err, "trigger bounced");
        let base = trigger.base_total().saturating_sub(self.fees.processing_fee);
        Bounce {
            error: err.to_string(),
            refunds: refunds(trigger, base),
        }
    }

    fn refuse(&self, trigger: &Trigger) -> Bounce {
        Bounce {
            error: FeeError::ProcessingFee.to_string(),
            refunds: refunds(trigger, trigger.base_total()),
        }
    }
}

fn refunds(trigger: &Trigger, base: Amount) -> Vec<Payment> {
    let mut refunds = Vec::new();
    if base > 0 {
        refunds.push(Payment {
            address: trigger.address.clone(),
            asset: Asset::Base,
            amount: base,
        });
    }
    if let Some(custom) = trigger.custom_payment().filter(|c| c.amount > 0) {
        refunds.push(Payment {
            address: trigger.address.clone(),
            asset: custom.asset.clone(),
            amount: custom.amount,
        });
    }
    refunds
}
