fn main() {
    medai_lib::run()
}
