pub mod logical_all_to_all;
pub mod logical_input_data;
pub mod logical_union;
pub mod operator;
