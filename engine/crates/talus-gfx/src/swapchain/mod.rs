pub mod present_target;
