mod hash234;
mod match_finder;
mod window;

pub use match_finder::{Match, MatchFinder};
pub use window::Window;
