fn main() {
    startgg_ongoing_lib::run()
}
