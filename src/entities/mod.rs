// Entity store - one module per table
//
// Every module follows the same shape: create / get / list / update / delete
// as free functions over a `rusqlite::Connection`. Uniqueness and references
// are enforced by SQLite; each write runs in its own transaction.

pub mod account;
pub mod aspect;
pub mod hero;
pub mod phase;
pub mod result;
pub mod villain;

pub use account::Account;
pub use aspect::Aspect;
pub use hero::{Hero, HeroForm};
pub use phase::Phase;
pub use result::{MatchResult, ResultForm, Verdict};
pub use villain::{Villain, VillainForm};
