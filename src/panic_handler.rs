use std::panic;

/// Debug builds get a readable backtrace, release builds a crash report file
pub fn initialize_panic_handler() {
    if cfg!(debug_assertions) {
        better_panic::install();
    } else {
        human_panic::setup_panic!();
    }

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        log::error!("Panic: {panic_info}");
        log::logger().flush();
        default_hook(panic_info);
    }));
}
