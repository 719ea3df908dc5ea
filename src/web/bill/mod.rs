pub mod container;
pub mod data;
pub mod new_bill;
pub mod ssr;
pub mod view;
