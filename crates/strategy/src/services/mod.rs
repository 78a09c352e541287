pub mod scanner_service;
