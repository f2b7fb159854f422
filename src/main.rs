fn main() {
    tsunroll::cli::run();
}
