pub mod accounts;
pub mod ledger_entries;
pub mod participants;
pub mod sessions;
pub mod settlement_records;
pub mod waiting_entries;

pub use accounts::Entity as Accounts;
pub use accounts::Model as Account;
pub use ledger_entries::Entity as LedgerEntries;
pub use ledger_entries::Model as LedgerEntry;
pub use participants::Entity as Participants;
pub use participants::Model as Participant;
pub use sessions::Entity as Sessions;
pub use sessions::Model as Session;
pub use settlement_records::Entity as SettlementRecords;
pub use settlement_records::Model as SettlementRecord;
pub use waiting_entries::Entity as WaitingEntries;
pub use waiting_entries::Model as WaitingEntry;
