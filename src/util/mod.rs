mod ulid_rand;

pub use ulid_rand::{max_ulid, rand_ulid};
