pub mod connection;

pub use connection::connect_to_quiz_page;
