pub mod chrome_driver;
pub mod driver;

pub use chrome_driver::{ChromeDriver, HeadlessChromeFactory};
pub use driver::{DriverFactory, SubmissionDriver};
