pub mod directory;
pub mod error;
pub mod supabase;

pub use directory::{Affiliation, DirectoryEntry, InMemoryDirectory, ReferenceDirectory, SupabaseDirectory};
pub use error::StoreError;
pub use supabase::SupabaseClient;
