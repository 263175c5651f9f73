use clap::Subcommand;

#[derive(Subcommand)]
pub enum RebalanceCommands {
    /// List catalogs, databases and tables with their location and size
    Inventory {
        /// Write listed sizes into the storage descriptor parameters
        #[arg(long)]
        stamp: bool,

        /// Report what --stamp would write without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Compute the placement plan without changing the catalog
    Plan,

    /// Move table locations so both backends carry a similar load
    Rebalance {
        /// Log the rewrites instead of submitting them
        #[arg(long)]
        dry_run: bool,
    },
}
