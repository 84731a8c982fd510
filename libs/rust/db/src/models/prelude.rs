pub use super::proposal::Entity as Proposal;
