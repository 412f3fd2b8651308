//! Reply texts sent back through the transport

use crate::session::Step;
use crate::traits::RegistrationRecord;

pub const GREETING: &str = "Hello! Welcome to the registration desk.

Available commands:
- Type \"register\" to start registration
- Type \"help\" for more information

How can I help you today?";

pub const HELP: &str = "🤖 Registration Bot Help

Available Commands:
• hello/hi - Get a greeting
• register - Start the registration process
• help - Show this help message

Registration Requirements:
• Name: Letters only, minimum 2 characters
• Phone: Minimum 10 digits
• Email: Valid email format (e.g., user@domain.com)

For support, contact the administrator.";

pub const UNKNOWN_COMMAND: &str = "I didn't understand that. Type \"help\" to see available commands.";

pub const DUPLICATE: &str = "⚠️ You're already registered: a registration with this email or contact number already exists. No new entry was saved.";

pub const STORAGE_FAILURE: &str = "❌ Sorry, there was an error saving your registration. Please type \"register\" to try again later.";

/// Initial prompt of a fresh session
pub fn welcome() -> String {
    format!(
        "📝 Welcome to Registration!\n\nPlease provide the following information one by one.\n\n1. {}",
        prompt(Step::Name)
    )
}

/// Prompt asking for the value of `step`
pub fn prompt(step: Step) -> &'static str {
    match step {
        Step::Name => "What's your full name?",
        Step::Contact => "Great! Now please provide your contact number:\n\nExample: +91 98765 43210",
        Step::Email => "Perfect! Now please provide your email address:\n\nExample: john.doe@example.com",
        Step::Course => "Excellent! What course are you interested in?",
        Step::Country => "Good! Which country are you from?",
        Step::University => "Almost done! What university do you attend or plan to attend?",
        Step::Complete => "Registration is complete.",
    }
}

/// Re-prompt after `step` rejected the input, with the expected format
pub fn rejection(step: Step) -> &'static str {
    match step {
        Step::Name => "❌ Invalid name! Please enter a valid name (letters only, minimum 2 characters).\n\nExample: John Doe",
        Step::Contact => "❌ Invalid phone number! Please enter a valid phone number (minimum 10 digits).\n\nExample: +91 98765 43210 or 9876543210",
        Step::Email => "❌ Invalid email! Please enter a valid email address.\n\nExample: john.doe@example.com",
        Step::Course => "❌ Course cannot be empty. Please tell us which course you're interested in.\n\nExample: Computer Science",
        Step::Country => "❌ Country cannot be empty. Please tell us which country you're from.\n\nExample: India",
        Step::University => "❌ University cannot be empty. Please tell us which university you attend or plan to attend.\n\nExample: MIT",
        Step::Complete => "Registration is complete.",
    }
}

/// Confirmation echoing every saved field
pub fn registration_complete(record: &RegistrationRecord) -> String {
    format!(
        "✅ Registration Complete!

Thank you for registering! Here's your information:
• Name: {}
• Contact: {}
• Email: {}
• Course: {}
• Country: {}
• University: {}

Your data has been saved successfully. We'll contact you soon!",
        record.name, record.contact, record.email, record.course, record.country, record.university
    )
}

/// Notice for a store held open by another program
pub fn storage_locked(medium: &str) -> String {
    format!(
        "❌ Error: the registration sheet is currently open. Please close {} and type \"register\" to try again.",
        medium
    )
}
