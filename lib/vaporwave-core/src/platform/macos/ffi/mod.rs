pub use consts::*;
pub use ext::*;
pub use private::*;

mod consts;
mod ext;
mod private;
