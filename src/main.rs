fn main() {
    packledger::run();
}
