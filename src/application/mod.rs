pub mod entry_service;
