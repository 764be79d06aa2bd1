//! Entity module - Contains all SeaORM entity definitions for the marketplace database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod logistics_booking;
pub mod logistics_profile;
pub mod mechanic_booking;
pub mod mechanic_profile;
pub mod notification;
pub mod order;
pub mod order_item;
pub mod order_service_link;
pub mod product;
pub mod shipping_address;
pub mod supplier_profile;
pub mod user;
pub mod wallet;
pub mod wallet_transaction;
pub mod withdrawal;

// Re-export specific types to avoid conflicts
pub use logistics_booking::{
    Entity as LogisticsBooking, LogisticsBookingStatus, Model as LogisticsBookingModel,
};
pub use logistics_profile::{Entity as LogisticsProfile, Model as LogisticsProfileModel};
pub use mechanic_booking::{
    Entity as MechanicBooking, MechanicBookingStatus, Model as MechanicBookingModel,
};
pub use mechanic_profile::{Entity as MechanicProfile, Model as MechanicProfileModel};
pub use notification::{Entity as Notification, Model as NotificationModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use order_service_link::{Entity as OrderServiceLink, Model as OrderServiceLinkModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use shipping_address::{Entity as ShippingAddress, Model as ShippingAddressModel};
pub use supplier_profile::{Entity as SupplierProfile, Model as SupplierProfileModel};
pub use user::{Entity as User, Model as UserModel, Role};
pub use wallet::{Entity as Wallet, Model as WalletModel};
pub use wallet_transaction::{
    Entity as WalletTransaction, LedgerKind, Model as WalletTransactionModel,
};
pub use withdrawal::{Entity as Withdrawal, Model as WithdrawalModel, WithdrawalStatus};
