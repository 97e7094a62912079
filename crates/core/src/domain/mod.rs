pub mod catalog;
pub mod product;
pub mod promo;
pub mod reply;
