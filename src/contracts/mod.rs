pub mod anchor_registry;
