fn main() {
    if let Err(err) = stackaudit::cli::run() {
        stackaudit::ui::eprintln_error(&err);
        std::process::exit(stackaudit::exit::exit_code(&err));
    }
}
