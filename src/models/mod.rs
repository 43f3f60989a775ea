/// Domain records shared by the stores and the HTTP handlers

mod item;
mod organisation;
mod user;

pub use item::{Item, ItemUpdate, Price};
pub use organisation::{Organisation, OrganisationUpdate};
pub use user::{Role, User, UserPublic, UserUpdate};
