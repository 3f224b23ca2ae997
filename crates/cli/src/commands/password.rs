//! Password generation.
//!
//! # Usage
//!
//! ```bash
//! gim-cli password generate --length 12
//! ```

use gigya_im_storefront::services::generate_password;

/// Print a generated password.
pub fn generate(length: usize) {
    #[allow(clippy::print_stdout)]
    {
        println!("{}", generate_password(length));
    }
}
