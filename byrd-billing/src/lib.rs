pub mod bank;
pub mod budget;
pub mod metering;
pub mod transfer;

pub use bank::{BankService, BankSummary, TransferReceipt};
pub use budget::BudgetCheck;
pub use transfer::{TransferPlan, TransferRequest};
