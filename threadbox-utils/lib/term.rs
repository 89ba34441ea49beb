//! Terminal glyphs used by the threadbox binaries.

use std::sync::LazyLock;

use console::style;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// A green checkmark.
pub static CHECKMARK: LazyLock<String> = LazyLock::new(|| format!("{}", style("✓").green()));

/// A red cross.
pub static CROSS: LazyLock<String> = LazyLock::new(|| format!("{}", style("✗").red()));
