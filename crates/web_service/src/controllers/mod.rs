pub mod messages_controller;
pub mod system_controller;
