use log::error;
use std::io::{self, Write};
use std::panic;

/// Install pretty backtraces plus a hook that records the panic in the log
/// file before the default report is printed.
///
/// Render workers run on their own threads; a panic there is logged and the
/// thread dies, and the scheduler then sees its channels close.
pub fn initialize_panic_handler() {
    better_panic::install();

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();
        let name = thread.name().unwrap_or("<unnamed>");
        error!("Panic on thread {name}: {panic_info}");
        log::logger().flush();

        default_hook(panic_info);
        let _ = io::stderr().flush();
    }));
}
