pub mod delivery_controller;

pub use delivery_controller::DeliveryController;
