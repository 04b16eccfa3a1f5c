pub mod detection_client;
