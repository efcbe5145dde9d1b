//! Error types for the Cascade settlement contract.
//!
//! The `Display` strings are part of the contract surface: callers receive
//! them verbatim as the bounce reason, so they must not change.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    #[error("Invalid repo: {0}")] InvalidFormat(String),
    #[error("bad symbols in repo")] BadSymbols,
    #[error("Invalid repo: {0} Don't set own repo in rules; You will receive the unshared remainder")] SelfReference(String),
    #[error("Invalid asset: {0}")] InvalidAsset(String),
    #[error("Invalid address: {0}")] InvalidAddress(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rules is not an object")] NotAnObject,
    #[error("Maximum number of recipient repositories is {max}")] TooManyRecipients { max: usize },
    #[error(transparent)] Repo(#[from] RepoError),
    #[error("Not a number {value} in repo {repo}")] NotANumber { value: String, repo: String },
    #[error("percentage must be between 0 and 100")] PercentOutOfRange,
    #[error("percentage {value} in repo {repo} has more than 6 decimal places")] TooPrecise { value: String, repo: String },
    #[error("Sum of rules distribution is more than 100")] SumExceeded,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Address {address} has no attestation for {owner}")] NotAttested { address: String, owner: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Rules for repo {0} are not set yet")] RulesNotSet(String),
    #[error("Nothing to distribute in repo {repo} for asset {asset}")] NothingToDistribute { repo: String, asset: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("Not enough fee to pay storage")] StorageFee,
    #[error("Not enough fee to pay rules storage")] RulesStorageFee,
    #[error("Not enough processing fee")] ProcessingFee,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NicknameError {
    #[error("Nickname is not a string")] NotAString,
    #[error("Nickname {0} is already taken")] Taken(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Unknown request")] UnknownRequest,
}

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error(transparent)] Repo(#[from] RepoError),
    #[error(transparent)] Rule(#[from] RuleError),
    #[error(transparent)] Auth(#[from] AuthError),
    #[error(transparent)] State(#[from] StateError),
    #[error(transparent)] Fee(#[from] FeeError),
    #[error(transparent)] Nickname(#[from] NicknameError),
    #[error(transparent)] Dispatch(#[from] DispatchError),
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error("storage: {0}")] Storage(String),
}
