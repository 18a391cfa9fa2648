pub mod query;
pub mod realtime;
pub mod supabase;

pub use query::PostgrestQuery;
pub use realtime::{ChangeEvent, ChangeFilter, ChangeKind, RealtimeHub, Subscription};
pub use supabase::SupabaseClient;
