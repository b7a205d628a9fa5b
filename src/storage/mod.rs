pub mod ipfs_client;
