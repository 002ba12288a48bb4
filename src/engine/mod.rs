pub mod category;
pub mod color;
pub mod dom;
pub mod highlighter;
pub mod index;
pub mod matcher;
pub mod observer;
pub mod session;
pub mod store;

pub use category::*;
pub use color::*;
pub use dom::*;
pub use highlighter::*;
pub use index::*;
pub use matcher::*;
pub use observer::*;
pub use session::*;
pub use store::*;
