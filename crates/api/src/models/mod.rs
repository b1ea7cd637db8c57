//! Domain models for the API.
//!
//! Row types derive `sqlx::FromRow` and serialize straight to the JSON the
//! storefront consumes. Request bodies live next to the routes that read them,
//! except where a repository takes them as input.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod review;
pub mod user;
pub mod wishlist;

pub use address::{Address, AddressInput};
pub use cart::{Cart, CartLine};
pub use catalog::{Category, CategoryInput, Product, ProductInput, ProductUpdate};
pub use order::{Order, OrderItem, OrderLine, OrderWithItems, ShippingAddress};
pub use review::Review;
pub use user::{User, UserWithPassword};
pub use wishlist::WishlistEntry;
