pub mod company;
pub mod contract;
pub mod ledger;
pub mod payment;
pub mod property;
pub mod user;

pub use company::Company;
pub use contract::Contract;
pub use ledger::{Account, AccountType, JournalEntry, JournalLine};
pub use payment::{Expense, Invoice, Payment};
pub use property::{Apartment, Property};
pub use user::User;
