//! Categories command feature.

use crate::categories::Registry;
use crate::output;

pub(crate) fn handle_categories() -> anyhow::Result<()> {
    output::print_registry(&Registry::builtin());
    Ok(())
}
