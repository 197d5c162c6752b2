//! Backend implementations.
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | MongoDB | [`mongodb`] | Document store; one collection per resource type |

pub mod mongodb;
