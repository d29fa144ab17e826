#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
// The ultimate strictness: catches things like missing documentation or overflow risks
#![warn(clippy::restriction)]

fn main() {
  benefit_wizard::run();
}
