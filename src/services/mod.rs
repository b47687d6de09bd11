// Storefront
pub mod catalog;
pub mod shipping;

// Checkout and payment settlement
pub mod checkout;
pub mod reconciler;

// Orders
pub mod orders;

// Accounts
pub mod accounts;
pub mod users;

// Back office
pub mod admin;
